pub mod evidence_tests;
