use qa_bench_core::client::DecodingMode;
use qa_bench_core::contract::ResponseContract;
use qa_bench_core::report::OutputFormat;

/// Parse decoding mode from string
pub fn parse_mode(s: &str) -> std::result::Result<DecodingMode, String> {
    s.parse::<DecodingMode>().map_err(|e| e.to_string())
}

/// Parse response contract from string
pub fn parse_contract(s: &str) -> std::result::Result<ResponseContract, String> {
    s.parse::<ResponseContract>().map_err(|e| e.to_string())
}

/// Parse output format from string
pub fn parse_format(s: &str) -> std::result::Result<OutputFormat, String> {
    s.parse::<OutputFormat>().map_err(|e| e.to_string())
}
