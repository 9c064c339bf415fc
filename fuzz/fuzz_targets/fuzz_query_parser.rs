#![no_main]

use libfuzzer_sys::fuzz_target;
use qeval::query::{IndriParams, RetrievalModel, optimize, parse_query};
use qeval::utils::Analyzer;

fuzz_target!(|data: &str| {
    // Malformed queries must come back as errors, never panics
    let model = RetrievalModel::Indri(IndriParams::default());
    if let Ok(tree) = parse_query(data, &model, &Analyzer::english()) {
        let _ = optimize(tree).map(|plan| plan.to_string());
    }
});
