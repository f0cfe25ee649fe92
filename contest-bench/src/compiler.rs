const COMPILERS: &[(&str, &str)] = &[
    ("C 11", "1"),
    ("C++ 11", "2"),
    ("delphi (fpc)", "3"),
    ("pascal (fpc)", "4"),
    ("python2", "5"),
    ("python3", "6"),
    ("java", "7"),
    ("C# (mono dmcs)", "8"),
    ("C#solution", "11"),
];

/// Maps a compiler's display name to the id the submit form expects.
/// Unknown names are returned unchanged so raw ids can be passed through.
#[must_use]
pub fn compiler_id(name: &str) -> &str {
    COMPILERS
        .iter()
        .find(|&&(known, _)| known == name)
        .map_or(name, |&(_, id)| id)
}
