mod markdown_tests;
