use gfs2s3_migrate::{Progress, ProgressSink};

/// Prints progress lines on stdout, keeping them apart from the log on
/// stderr.
pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn report(&self, progress: &Progress) {
        println!("{progress}");
    }
}
