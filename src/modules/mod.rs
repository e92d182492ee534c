pub mod accounts;
pub mod character;
pub mod pages;
