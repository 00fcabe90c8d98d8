pub mod console_sink;
