mod support;

mod cost_test;
mod pipeline_test;
mod progress_test;
mod retry_test;
mod selector_test;
mod stage_machine_test;
