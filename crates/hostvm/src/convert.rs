//! Tar stream to fixed VHD conversion inside a hosting VM.

use crate::vm::HostingVm;
use hostvm_core::{Error, ProcessOptions, Result};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncRead;

/// Streams the tar archive read from `reader` through the guest's converter
/// into a fixed VHD at `target`, returning the number of bytes written.
///
/// `target` is created (or truncated) before the converter starts. If the
/// conversion fails the file is closed but left on disk; removing it is up to
/// the caller.
pub async fn tar_to_vhd<R>(vm: Option<&HostingVm>, target: impl AsRef<Path>, reader: R) -> Result<u64>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let target = target.as_ref();
    let vm = vm.ok_or_else(|| Error::MissingConfig("hosting VM for tar2vhd".into()))?;
    tracing::debug!(vm = %vm.id(), path = %target.display(), "tar2vhd");

    let out_file = File::create(target).await?;

    let options = ProcessOptions::new(vm.config().converter_args.iter().cloned())
        .stdin(reader)
        .stdout(out_file);
    let mut process = match vm.create_process(options).await {
        Ok(process) => process,
        Err(e) => {
            tracing::warn!(
                path = %target.display(),
                "tar2vhd failed to start, output file left behind: {}",
                e
            );
            return Err(e);
        }
    };

    let waited = process.wait().await;
    let closed = process.close().await;
    let exit = match (waited, closed) {
        (Ok(exit), Ok(())) => exit,
        (Ok(_), Err(e)) => return Err(e),
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                tracing::warn!("failed to close tar2vhd process: {}", close_err);
            }
            return Err(e);
        }
    };

    if exit.exit_code != 0 {
        return Err(Error::GuestProcess(format!(
            "tar2vhd for {} exited with code {}",
            target.display(),
            exit.exit_code
        )));
    }

    tracing::debug!(
        vm = %vm.id(),
        path = %target.display(),
        bytes = exit.bytes_out,
        "tar2vhd created"
    );
    Ok(exit.bytes_out)
}
