pub mod manage_repo;
