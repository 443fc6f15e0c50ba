//! Phase-keyed recommendations for stalled builds

/// Advice for a phase label; the first entry whose key occurs in the label wins
const PHASE_ADVICE: &[(&str, &[&str])] = &[
    (
        "Swift",
        &[
            "Check for complex type-inference expressions in the file being compiled",
            "Add explicit type annotations to long literal or closure chains",
            "Try building with -Xfrontend -debug-time-function-bodies to find slow functions",
        ],
    ),
    (
        "Linking",
        &[
            "Check for large static libraries or duplicate symbols",
            "Ensure enough free memory is available for the linker",
            "Consider enabling incremental linking or reducing dead-strip work",
        ],
    ),
    (
        "Resolving Dependencies",
        &[
            "Check network connectivity to package repositories",
            "Clear the package cache and resolve dependencies again",
            "Look for version conflicts in the package manifest",
        ],
    ),
    (
        "Running Scripts",
        &[
            "Inspect custom build-phase scripts for blocking commands",
            "Ensure scripts do not wait for interactive input",
        ],
    ),
    (
        "Code Signing",
        &[
            "Check that the signing identity is available and unlocked",
            "Verify the keychain is not prompting for a password",
        ],
    ),
    (
        "Compiling",
        &[
            "Check the file currently being compiled for expensive constructs",
            "Rebuild with a single job to isolate the stalled compile step",
        ],
    ),
];

const GENERAL_ADVICE: &[&str] = &[
    "Cancel the build and retry with a clean build folder",
    "Check system CPU and memory usage for resource exhaustion",
];

/// Recommendations for a stall in `phase`, phase-specific entries first
pub fn recommendations_for(phase: Option<&str>) -> Vec<String> {
    let specific = phase.and_then(|phase| {
        PHASE_ADVICE
            .iter()
            .find(|(key, _)| phase.contains(key))
            .map(|(_, advice)| *advice)
    });

    specific
        .unwrap_or_default()
        .iter()
        .chain(GENERAL_ADVICE.iter())
        .map(|s| s.to_string())
        .collect()
}
