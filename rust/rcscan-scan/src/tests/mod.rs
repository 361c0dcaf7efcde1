mod file_builder;
