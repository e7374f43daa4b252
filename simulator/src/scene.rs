pub mod ray;
