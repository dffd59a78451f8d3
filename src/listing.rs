use std::collections::BTreeSet;

/// Everything found below a root URL.
#[derive(Debug, PartialEq, Clone)]
pub struct Listing {
    pub root: String,
    pub files: BTreeSet<String>,
    pub directories: BTreeSet<String>,
}

impl Listing {
    pub fn new(root: String) -> Self {
        Listing {
            root,
            files: BTreeSet::new(),
            directories: BTreeSet::new(),
        }
    }

    pub fn add_file(&mut self, url: String) {
        self.files.insert(url);
    }

    pub fn add_directory(&mut self, url: String) {
        self.directories.insert(url);
    }
}

/// Directory links end with a slash, everything else is a file.
pub fn is_directory(link: &str) -> bool {
    link.ends_with('/')
}
