//! Verify command implementation.

use super::{CliError, LogOptions};
use segwal_core::wal::PageSource;
use segwal_core::LogReader;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of segments checked.
    pub segments_checked: usize,
    /// Number of pages checked.
    pub pages_checked: u64,
    /// Number of valid pages.
    pub valid_pages: u64,
    /// Number of damaged pages.
    pub corrupt_pages: u64,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.corrupt_pages == 0 && self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(options: &LogOptions) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying log at {:?}", options.path);
    println!();

    let reader = options.open()?;
    let result = verify(&reader)?;
    print_result(&result);

    println!();
    if result.is_ok() {
        println!("✓ Log verification passed");
        Ok(())
    } else {
        println!("✗ Log verification failed");
        Err(CliError::VerificationFailed(result.corrupt_pages).into())
    }
}

/// Checks every page of every segment.
pub fn verify(reader: &LogReader) -> Result<VerifyResult, CliError> {
    let mut result = VerifyResult::default();

    for &segment in reader.segments() {
        let scan = reader.scan(segment)?;
        result.segments_checked += 1;
        result.pages_checked += scan.pages;
        result.valid_pages += scan.valid_pages;
        result.corrupt_pages += scan.pages - scan.valid_pages;

        if let Some(page) = scan.first_invalid {
            result.errors.push(format!(
                "segment {segment}: {} damaged page(s), first at page {page}",
                scan.pages - scan.valid_pages
            ));
        }
        let file_size = reader.segment_len(segment)?;
        let page_size = reader.page_size() as u64;
        if file_size % page_size != 0 {
            result.errors.push(format!(
                "segment {segment}: {} trailing bytes after the last whole page",
                file_size % page_size
            ));
        }
    }

    Ok(result)
}

fn print_result(result: &VerifyResult) {
    println!(
        "  Segments checked: {}, pages: {}, valid: {}, corrupt: {}",
        result.segments_checked, result.pages_checked, result.valid_pages, result.corrupt_pages
    );
    for error in &result.errors {
        println!("    ERROR: {}", error);
    }
}
