//! Code registry

use flate2::read::GzDecoder;
use std::io::Read;
use tracing::{info, warn};
use veil_storage::codec;
use veil_types::{AccAddress, CodeInfo};

use super::Keeper;
use crate::context::Context;
use crate::keys;
use crate::{KeeperError, KeeperResult};

const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

impl Keeper {
    /// Validate and register bytecode, returning its new code id.
    ///
    /// The id is allocated only once the enclave has accepted the code, so
    /// failed uploads leave no gaps.
    pub fn create(
        &self,
        ctx: &Context,
        creator: &AccAddress,
        wasm_code: &[u8],
        source: &str,
        builder: &str,
    ) -> KeeperResult<u64> {
        let wasm_code = uncompress(wasm_code, self.config.max_contract_size)
            .map_err(KeeperError::CreateFailed)?;
        let code_hash = self.enclave.create(&wasm_code).map_err(|e| {
            warn!(creator = %creator, error = %e, "Enclave rejected code");
            KeeperError::CreateFailed(e.to_string())
        })?;

        let code_id = self.auto_increment_id(ctx, keys::KEY_LAST_CODE_ID)?;
        let code_info = CodeInfo::new(code_hash, *creator, source, builder);
        codec::put_record(&self.store(ctx), &keys::code_key(code_id), &code_info)?;

        info!(
            code_id = code_id,
            code_hash = %code_info.code_hash_hex(),
            creator = %creator,
            size = wasm_code.len(),
            "Stored contract code"
        );
        Ok(code_id)
    }

    pub fn get_code_info(&self, ctx: &Context, code_id: u64) -> KeeperResult<Option<CodeInfo>> {
        Ok(codec::get_record(&self.store(ctx), &keys::code_key(code_id))?)
    }

    /// Bytecode of `code_id`, fetched from the enclave by content hash
    pub fn get_byte_code(&self, ctx: &Context, code_id: u64) -> KeeperResult<Option<Vec<u8>>> {
        let Some(code_info) = self.get_code_info(ctx, code_id)? else {
            return Ok(None);
        };
        self.enclave
            .get_code(&code_info.code_hash)
            .map(Some)
            .map_err(|e| KeeperError::NotFound(format!("bytecode of code {}: {}", code_id, e)))
    }

    /// The id the next successful `create` will assign
    pub fn get_next_code_id(&self, ctx: &Context) -> KeeperResult<u64> {
        self.peek_auto_increment_id(ctx, keys::KEY_LAST_CODE_ID)
    }

    /// Register code under a fixed id, checking the enclave derives the
    /// recorded hash. Used by genesis import.
    pub(crate) fn import_code(
        &self,
        ctx: &Context,
        code_id: u64,
        code_info: &CodeInfo,
        wasm_code: &[u8],
    ) -> KeeperResult<()> {
        let wasm_code = uncompress(wasm_code, self.config.max_contract_size)
            .map_err(KeeperError::CreateFailed)?;
        let code_hash = self
            .enclave
            .create(&wasm_code)
            .map_err(|e| KeeperError::CreateFailed(e.to_string()))?;
        if code_hash != code_info.code_hash {
            return Err(KeeperError::InvalidRequest(format!(
                "code hash mismatch for code {}: expected {}, got {}",
                code_id,
                code_info.code_hash_hex(),
                hex::encode(code_hash)
            )));
        }
        let key = keys::code_key(code_id);
        let store = self.store(ctx);
        if codec::get_record::<CodeInfo>(&store, &key)?.is_some() {
            return Err(KeeperError::InvalidRequest(format!("duplicate code id {}", code_id)));
        }
        codec::put_record(&store, &key, code_info)?;
        Ok(())
    }
}

/// Gunzip `code` if it carries the gzip magic. Either way the result must
/// not exceed `limit` bytes.
pub(crate) fn uncompress(code: &[u8], limit: usize) -> Result<Vec<u8>, String> {
    if !code.starts_with(&GZIP_MAGIC) {
        if code.len() > limit {
            return Err(format!("code exceeds {} bytes: {}", limit, code.len()));
        }
        return Ok(code.to_vec());
    }

    let mut out = Vec::new();
    GzDecoder::new(code)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| format!("cannot decompress code: {}", e))?;
    if out.len() > limit {
        return Err(format!("decompressed code exceeds {} bytes", limit));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_raw_code_passes_through() {
        assert_eq!(uncompress(b"\0asm", 16).unwrap(), b"\0asm");
        assert!(uncompress(&[0u8; 17], 16).is_err());
    }

    #[test]
    fn test_gzip_code_is_inflated() {
        let code = b"\0asm\x01\x00\x00\x00 some body".to_vec();
        assert_eq!(uncompress(&gzip(&code), 1024).unwrap(), code);
    }

    #[test]
    fn test_gzip_bomb_is_capped() {
        let compressed = gzip(&vec![0u8; 10_000]);
        assert!(compressed.len() < 1_000);
        let err = uncompress(&compressed, 1_000).unwrap_err();
        assert!(err.contains("exceeds"));
    }
}
