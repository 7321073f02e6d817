//! Core value objects exchanged with the lending and token contracts

pub mod account;
pub mod limits;
pub mod loan;
