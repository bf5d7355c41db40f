pub mod runner;

pub use runner::{
    run_pipeline, run_processor, run_reader, run_writer, NumberedSubmission, PipelineError,
    PipelineOutcome,
};
