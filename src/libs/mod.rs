pub mod a3m;
pub mod aligned;
pub mod complex;
pub mod db;
pub mod error;
pub mod io;
pub mod pid;
