use std::path::Path;

use tracing::info;
use unpacker_core::command::CommandRunner;

use crate::{
    types::{InstallOptions, InstallOutcome, InstallStatus},
    Unpacker,
};

impl<R: CommandRunner> Unpacker<R> {
    /// Analyses and installs `source` in one go.
    ///
    /// Never returns early with an error: every failure, including a
    /// duplicate run for the same archive, ends up in the outcome.
    pub async fn run(&self, source: &Path, options: InstallOptions) -> InstallOutcome {
        info!(source = %source.display(), "starting pipeline");
        match self.start(source).await {
            Ok(analysis) => self.install(analysis, options).await,
            Err((err, transcript)) => {
                InstallOutcome {
                    status: InstallStatus::Failure(err),
                    transcript,
                }
            }
        }
    }
}
