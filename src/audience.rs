use std::collections::HashSet;

/// Supplies the audience keys of the current evaluation, e.g. from the authenticated user of an
/// inbound request.
///
/// Implemented for closures:
///
/// ```
/// # use std::collections::HashSet;
/// # use featureboard::AudienceSource;
/// let source = || HashSet::from(["beta".to_owned()]);
/// assert!(source.audience_keys().contains("beta"));
/// ```
pub trait AudienceSource {
    fn audience_keys(&self) -> HashSet<String>;
}

impl<F: Fn() -> HashSet<String>> AudienceSource for F {
    fn audience_keys(&self) -> HashSet<String> {
        self()
    }
}
