pub mod gr;
