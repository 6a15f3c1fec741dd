//! Binary read tool: a byte range of a file, encoded as hex or base64.

use std::io::SeekFrom;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use nanocode_core::error::ToolError;
use nanocode_core::params::Parameters;
use nanocode_core::result::ToolResult;
use nanocode_core::schema::{ParameterSchema, PropertySchema};
use nanocode_core::tool::{Tool, ToolContext, ToolSpec};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

const NAME: &str = "read_binary";

pub struct ReadBinaryTool {
    spec: ToolSpec,
    max_bytes: u64,
}

impl ReadBinaryTool {
    pub fn new(max_bytes: u64) -> Self {
        let spec = ToolSpec::new(NAME, "file", "Read raw bytes from a file as hex or base64")
            .tags(["file", "read", "binary"])
            .schema(
                ParameterSchema::object()
                    .property("path", PropertySchema::string("File path to read").with_length(Some(1), None))
                    .property("offset", PropertySchema::integer("Byte offset to start at").with_default(0))
                    .property(
                        "length",
                        PropertySchema::integer("Number of bytes to read (0 reads to the end)").with_default(0),
                    )
                    .property(
                        "encoding",
                        PropertySchema::string("Output encoding")
                            .with_enum(["hex", "base64"])
                            .with_default("hex"),
                    )
                    .required(["path"]),
            );
        Self { spec, max_bytes }
    }
}

fn non_negative(params: &Parameters, key: &str) -> Result<u64, ToolError> {
    let value = params.int_or(key, 0).map_err(|e| e.for_tool(NAME))?;
    u64::try_from(value).map_err(|_| ToolError::invalid_params(NAME, format!("{key} must not be negative")))
}

#[async_trait]
impl Tool for ReadBinaryTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _ctx: &ToolContext, params: &Parameters) -> Result<ToolResult, ToolError> {
        let path = params.get_string("path").map_err(|e| e.for_tool(NAME))?;
        let offset = non_negative(params, "offset")?;
        let length = non_negative(params, "length")?;
        let encoding = params.string_or("encoding", "hex").map_err(|e| e.for_tool(NAME))?;

        let meta = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::execution_failed(NAME, format!("file not found: {path}")));
            }
            Err(e) => return Err(ToolError::execution_failed(NAME, e.to_string())),
        };
        if meta.is_dir() {
            return Err(ToolError::execution_failed(NAME, format!("path is a directory: {path}")));
        }
        let size = meta.len();
        if offset > size {
            return Err(ToolError::invalid_params(
                NAME,
                format!("offset {offset} is past the end of the file ({size} bytes)"),
            ));
        }

        let available = size - offset;
        let wanted = if length == 0 { available } else { length.min(available) };
        if wanted > self.max_bytes {
            return Err(ToolError::execution_failed(
                NAME,
                format!("range too large: {wanted} bytes (max: {} bytes)", self.max_bytes),
            ));
        }

        debug!(path = %path, offset, wanted, "Reading bytes");
        let failed = |e: std::io::Error| ToolError::execution_failed(NAME, format!("failed to read {path}: {e}"));
        let mut file = tokio::fs::File::open(&path).await.map_err(failed)?;
        file.seek(SeekFrom::Start(offset)).await.map_err(failed)?;
        let mut bytes = Vec::with_capacity(wanted as usize);
        file.take(wanted).read_to_end(&mut bytes).await.map_err(failed)?;

        let output = match encoding.as_str() {
            "base64" => STANDARD.encode(&bytes),
            _ => hex::encode(&bytes),
        };
        Ok(ToolResult::text(output)
            .meta("path", path)
            .meta("size", size)
            .meta("offset", offset)
            .meta("bytes_read", bytes.len())
            .meta("encoding", encoding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0x00, 0x01, 0xab, 0xff, b'h', b'i']).unwrap();
        let path = path.to_str().unwrap().to_string();
        (dir, path)
    }

    async fn run(tool: &ReadBinaryTool, params: Parameters) -> Result<ToolResult, ToolError> {
        tool.execute(&ToolContext::default(), &params).await
    }

    #[tokio::test]
    async fn whole_file_as_hex_by_default() {
        let (_dir, path) = fixture();
        let result = run(&ReadBinaryTool::new(1024), Parameters::new().with("path", path.as_str()))
            .await
            .unwrap();
        assert_eq!(result.output, "0001abff6869");
        assert_eq!(result.metadata["bytes_read"], 6);
        assert_eq!(result.metadata["encoding"], "hex");
    }

    #[tokio::test]
    async fn range_as_base64() {
        let (_dir, path) = fixture();
        let params = Parameters::new()
            .with("path", path.as_str())
            .with("offset", 4)
            .with("length", 10)
            .with("encoding", "base64");
        let result = run(&ReadBinaryTool::new(1024), params).await.unwrap();
        assert_eq!(result.output, "aGk=");
        assert_eq!(result.metadata["offset"], 4);
        assert_eq!(result.metadata["bytes_read"], 2);
    }

    #[tokio::test]
    async fn bad_ranges_are_rejected() {
        let (_dir, path) = fixture();
        let tool = ReadBinaryTool::new(4);

        let err = run(&tool, Parameters::new().with("path", path.as_str()).with("offset", 7))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");

        let err = run(&tool, Parameters::new().with("path", path.as_str()).with("offset", -1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must not be negative"));

        let err = run(&tool, Parameters::new().with("path", path.as_str()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("range too large"));

        let ok = run(&tool, Parameters::new().with("path", path.as_str()).with("length", 4))
            .await
            .unwrap();
        assert_eq!(ok.output, "0001abff");
    }

    #[test]
    fn read_only_without_approval() {
        let tool = ReadBinaryTool::new(1024);
        assert!(!tool.info().requires_permission);
        let bad = Parameters::new().with("path", "x").with("encoding", "raw");
        assert!(bad.validate(tool.schema()).is_err());
    }
}
