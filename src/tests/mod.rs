pub mod amount_tests;
pub mod peer_tests;
pub mod verify_tests;
