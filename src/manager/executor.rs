//! Exit-code contract and output decoding for executed commands.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::manager::error::{Error, Result, format_codes};
use crate::manager::types::{DecodedOutput, ExecutionResult, RawOutput};

/// How stdout is decoded after the exit code check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputDecoding {
    #[default]
    None,
    Json,
    Yaml,
}

impl OutputDecoding {
    /// Map the two legacy boolean switches onto a single mode.
    pub fn from_flags(jsonify: bool, yamlify: bool) -> Result<Self> {
        match (jsonify, yamlify) {
            (true, true) => Err(Error::invalid_argument(
                "Conflicting arguments: yamlify and jsonify!",
            )),
            (true, false) => Ok(OutputDecoding::Json),
            (false, true) => Ok(OutputDecoding::Yaml),
            (false, false) => Ok(OutputDecoding::None),
        }
    }
}

/// Options for [`execute_checked`](crate::manager::SshManager::execute_checked).
///
/// Defaults: no custom message, no decoding, exit code `0` expected, mismatch
/// raises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    pub error_message: Option<String>,
    pub decoding: OutputDecoding,
    pub expected_exit_codes: Vec<i32>,
    pub raise_on_mismatch: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            error_message: None,
            decoding: OutputDecoding::None,
            expected_exit_codes: vec![0],
            raise_on_mismatch: true,
        }
    }
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with decoding taken from the `jsonify`/`yamlify` pair.
    pub fn from_flags(jsonify: bool, yamlify: bool) -> Result<Self> {
        Ok(Self::default().with_decoding(OutputDecoding::from_flags(jsonify, yamlify)?))
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_decoding(mut self, decoding: OutputDecoding) -> Self {
        self.decoding = decoding;
        self
    }

    pub fn json(self) -> Self {
        self.with_decoding(OutputDecoding::Json)
    }

    pub fn yaml(self) -> Self {
        self.with_decoding(OutputDecoding::Yaml)
    }

    pub fn with_expected_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.expected_exit_codes = codes.into_iter().collect();
        self
    }

    pub fn with_raise_on_mismatch(mut self, raise: bool) -> Self {
        self.raise_on_mismatch = raise;
        self
    }
}

/// Diagnostic block logged for every checked command.
pub(crate) fn format_details(host: &str, command: &str, result: &ExecutionResult) -> String {
    format!(
        "Host:      {}\nCommand:   '{}'\nExit code: {}\nSTDOUT:\n{}\nSTDERR:\n{}",
        host, command, result.exit_code, result.stdout_str, result.stderr_str
    )
}

/// Normalize `raw`, enforce the expected exit codes and decode stdout.
pub(crate) fn check_output(
    host: &str,
    command: &str,
    raw: RawOutput,
    options: &ExecOptions,
) -> Result<ExecutionResult> {
    let mut result = ExecutionResult::from(raw);
    let details = format_details(host, command, &result);

    if options.expected_exit_codes.contains(&result.exit_code) {
        debug!("{}", details);
    } else {
        let message = options.error_message.clone().unwrap_or_else(|| {
            format!(
                "Unexpected exit_code returned: actual {}, expected {}.",
                result.exit_code,
                format_codes(&options.expected_exit_codes)
            )
        });
        error!("{}  Command: '{}'  Details:\n{}", message, command, details);

        if options.raise_on_mismatch {
            return Err(Error::UnexpectedExitCode {
                command: command.to_string(),
                exit_code: result.exit_code,
                expected: options.expected_exit_codes.clone(),
                stdout: result.stdout_str,
                stderr: result.stderr_str,
            });
        }
    }

    result.decoded = decode_output(&result.stdout_str, options.decoding)?;
    Ok(result)
}

/// Decode `text` according to `decoding`, logging the raw text on failure.
pub(crate) fn decode_output(text: &str, decoding: OutputDecoding) -> Result<Option<DecodedOutput>> {
    let decoded = match decoding {
        OutputDecoding::None => return Ok(None),
        OutputDecoding::Json => serde_json::from_str(text)
            .map(DecodedOutput::Json)
            .map_err(Error::from),
        OutputDecoding::Yaml => serde_yaml::from_str(text)
            .map(DecodedOutput::Yaml)
            .map_err(Error::from),
    };

    match decoded {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            error!("Unable to deserialize. Actual string:\n{}", text);
            Err(e)
        }
    }
}
