// Copyright (c) 2026 Rolegate
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

fn rust_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(read) = std::fs::read_dir(dir) else { return };
    for entry in read.flatten() {
        let path = entry.path();
        if path.is_dir() {
            rust_files(&path, out);
        } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
            out.push(path);
        }
    }
}

#[test]
fn every_source_file_carries_the_full_license_header() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let header: String = std::fs::read_to_string(root.join("src/lib.rs"))
        .expect("lib.rs")
        .lines()
        .take(10)
        .map(|l| format!("{l}\n"))
        .collect();
    assert!(header.starts_with("// Copyright (c) 2026 Rolegate\n"));
    assert!(header.ends_with("// limitations under the License.\n"));

    let mut files = Vec::new();
    for dir in ["src", "tests", "fuzz/fuzz_targets"] {
        rust_files(&root.join(dir), &mut files);
    }
    assert!(files.len() > 20);

    let short: Vec<_> = files
        .iter()
        .filter(|p| {
            !std::fs::read_to_string(p)
                .map(|s| s.starts_with(&header))
                .unwrap_or(false)
        })
        .collect();
    assert!(short.is_empty(), "truncated or missing headers: {short:?}");
}
