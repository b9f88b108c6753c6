pub mod gets;
