pub mod parse_job_http_repository;
pub mod parsed_record_fs_repository;
