pub mod check_accounts;
pub mod listen_commands;
pub mod scheduler;
