//! Pulling a single executable out of a downloaded asset.

use crate::error::{Error, Result};
use crate::types::ReleaseAsset;
use flate2::read::GzDecoder;
use std::io::Read;
use tar::Archive;

/// Extract `binary` from an asset's bytes.
///
/// Tarballs are searched for a regular file whose name is `binary`, at any
/// depth. Anything else is taken to be the executable itself.
pub fn extract_binary(asset: &ReleaseAsset, data: &[u8], binary: &str) -> Result<Vec<u8>> {
    if asset.is_tarball() {
        extract_from_targz(&asset.name, data, binary)
    } else {
        Ok(data.to_vec())
    }
}

fn extract_from_targz(asset: &str, data: &[u8], binary: &str) -> Result<Vec<u8>> {
    let unpack_err = |e: std::io::Error| Error::Archive {
        asset: asset.to_string(),
        message: e.to_string(),
    };

    let mut archive = Archive::new(GzDecoder::new(data));

    for entry in archive.entries().map_err(unpack_err)? {
        let mut entry = entry.map_err(unpack_err)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let is_match = entry
            .path()
            .map_err(unpack_err)?
            .file_name()
            .is_some_and(|n| n == binary);

        if is_match {
            log::debug!("found {binary} in {asset}");
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).map_err(unpack_err)?;
            return Ok(contents);
        }
    }

    Err(Error::BinaryNotInArchive {
        binary: binary.to_string(),
        asset: asset.to_string(),
    })
}
