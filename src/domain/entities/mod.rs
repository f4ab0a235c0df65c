pub mod parse_job;
pub mod parsed_record;
