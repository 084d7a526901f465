//! Scanning of raw `#SBATCH` directive fragments.
//!
//! Jobs carry their scheduler directives as opaque strings; the backend only
//! ever needs the value of a handful of flags out of them. The scanner below
//! mimics how Slurm itself treats repeated flags: the last occurrence wins.

/// Return the value of the last occurrence of any spelling of a flag.
///
/// Fragments are tokenized on whitespace, so `-C gpu`, `-Cgpu`,
/// `--constraint gpu` and `--constraint=gpu` all yield `gpu`, whether the
/// flag and its value share a fragment or not.
pub(crate) fn last_flag_value(fragments: &[String], spellings: &[&str]) -> Option<String> {
    let mut value = None;
    let mut tokens = fragments
        .iter()
        .flat_map(|f| f.split_whitespace())
        .peekable();

    while let Some(tok) = tokens.next() {
        for spelling in spellings {
            if tok == *spelling {
                if tokens.peek().is_some() {
                    value = tokens.next().map(str::to_string);
                }
                break;
            }

            let Some(rest) = tok.strip_prefix(spelling) else {
                continue;
            };
            if spelling.starts_with("--") {
                if let Some(v) = rest.strip_prefix('=') {
                    value = Some(v.to_string());
                    break;
                }
            } else if !rest.is_empty() {
                // Short options may carry their value attached: `-Cgpu`.
                value = Some(rest.to_string());
                break;
            }
        }
    }

    value
}

/// Whether the raw directives request a job array (`-a`/`--array`).
pub(crate) fn is_array_request(options: &[String]) -> bool {
    last_flag_value(options, &["-a", "--array"]).is_some_and(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(fragments: &[&str]) -> Vec<String> {
        fragments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flag_spellings() {
        let spellings = &["-C", "--constraint"];
        assert_eq!(
            last_flag_value(&opts(&["-C gpu"]), spellings).as_deref(),
            Some("gpu")
        );
        assert_eq!(
            last_flag_value(&opts(&["-Cgpu"]), spellings).as_deref(),
            Some("gpu")
        );
        assert_eq!(
            last_flag_value(&opts(&["--constraint=gpu"]), spellings).as_deref(),
            Some("gpu")
        );
        assert_eq!(
            last_flag_value(&opts(&["--constraint", "gpu"]), spellings).as_deref(),
            Some("gpu")
        );
        assert_eq!(last_flag_value(&opts(&["--mem=4G"]), spellings), None);
    }

    #[test]
    fn test_last_occurrence_wins() {
        let spellings = &["-C", "--constraint"];
        assert_eq!(
            last_flag_value(&opts(&["-C mc", "--mem=4G", "--constraint=gpu"]), spellings)
                .as_deref(),
            Some("gpu")
        );
    }

    #[test]
    fn test_short_flag_does_not_match_long_options() {
        // `--partition=x` must not be mistaken for `-p` with an attached value.
        assert_eq!(
            last_flag_value(&opts(&["--partition=debug"]), &["-p", "--partition"]).as_deref(),
            Some("debug")
        );
        assert_eq!(
            last_flag_value(&opts(&["-p debug"]), &["-p", "--partition"]).as_deref(),
            Some("debug")
        );
    }

    #[test]
    fn test_array_request() {
        assert!(is_array_request(&opts(&["--array=0-3"])));
        assert!(is_array_request(&opts(&["-a 0-3"])));
        assert!(!is_array_request(&opts(&["--mem=4G"])));
        assert!(!is_array_request(&opts(&[])));
    }
}
