//! Regex existence cache for hook names
//!
//! Engines declare which rule names they can possibly implement. A hook whose
//! name matches no declared pattern is skipped without walking the chain.

use std::cell::RefCell;

use regex::Regex;
use rustc_hash::FxHashMap;

use repf_errors::{RepfError, Result};

#[derive(Debug, Default)]
pub struct RuleExistsHelper {
    patterns: Vec<Regex>,
    cache: RefCell<FxHashMap<String, bool>>,
}

impl RuleExistsHelper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile patterns as full-match expressions
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut helper = Self::new();
        for pattern in patterns {
            helper.register(pattern.as_ref())?;
        }
        Ok(helper)
    }

    pub fn register(&mut self, pattern: &str) -> Result<()> {
        let anchored = format!("^(?:{})$", pattern);
        let regex = Regex::new(&anchored).map_err(|e| RepfError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        self.patterns.push(regex);
        self.cache.get_mut().clear();
        Ok(())
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Whether `name` passes any registered pattern
    pub fn check_operation(&self, name: &str) -> bool {
        if let Ok(cache) = self.cache.try_borrow() {
            if let Some(hit) = cache.get(name) {
                return *hit;
            }
        }

        let matched = self.patterns.iter().any(|re| re.is_match(name));
        if let Ok(mut cache) = self.cache.try_borrow_mut() {
            cache.insert(name.to_string(), matched);
        }
        matched
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use repf_errors::codes::SYS_INVALID_INPUT_PARAM;

    #[test]
    fn test_patterns_match_whole_name() {
        let helper =
            RuleExistsHelper::from_patterns(["ac[^ ]*", "[^ ]*pep_[^ ]*_(pre|post)", "msi[^ ]*"])
                .unwrap();

        assert!(helper.check_operation("acPreConnect"));
        assert!(helper.check_operation("pep_api_data_obj_open_pre"));
        assert!(helper.check_operation("audit_pep_api_data_obj_open_post"));
        assert!(!helper.check_operation("pep_api_data_obj_open_finally"));
        assert!(!helper.check_operation("xacPreConnect"));
    }

    #[test]
    fn test_results_are_cached() {
        let helper = RuleExistsHelper::from_patterns(["pep_.*"]).unwrap();
        assert!(helper.check_operation("pep_x_pre"));
        assert!(helper.check_operation("pep_x_pre"));
        assert_eq!(helper.cache.borrow().len(), 1);
    }

    #[test]
    fn test_register_invalidates_cache() {
        let mut helper = RuleExistsHelper::new();
        assert!(!helper.check_operation("acPostProcForPut"));
        helper.register("ac.*").unwrap();
        assert!(helper.check_operation("acPostProcForPut"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = RuleExistsHelper::from_patterns(["pep_(unclosed"]).unwrap_err();
        assert_eq!(err.code(), SYS_INVALID_INPUT_PARAM);
    }
}
