pub mod run_full_server;
