pub mod bsa;
