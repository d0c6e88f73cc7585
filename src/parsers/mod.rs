pub mod measurement_parser;
