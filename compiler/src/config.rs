use crate::target::Target;
use std::path::PathBuf;

/// The garbage collection mode of a translation unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GcMode {
    /// Memory is managed using reference counting only.
    None,

    /// Code supports both garbage collection and reference counting.
    Mixed,

    /// Code requires a garbage collector.
    Only,
}

impl GcMode {
    pub fn from_str(input: &str) -> Option<GcMode> {
        match input {
            "none" => Some(GcMode::None),
            "mixed" => Some(GcMode::Mixed),
            "only" => Some(GcMode::Only),
            _ => None,
        }
    }

    pub fn is_enabled(self) -> bool {
        !matches!(self, GcMode::None)
    }
}

/// What to do when two distinct names produce the same identifier hash.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CollisionPolicy {
    Ignore,
    Warn,

    /// Fail the compilation when finalizing the module.
    Error,
}

impl CollisionPolicy {
    pub fn from_str(input: &str) -> Option<CollisionPolicy> {
        match input {
            "ignore" => Some(CollisionPolicy::Ignore),
            "warn" => Some(CollisionPolicy::Warn),
            "error" => Some(CollisionPolicy::Error),
            _ => None,
        }
    }
}

/// A type for storing compiler configuration, such as the target to compile
/// for.
pub struct Config {
    /// The target to compile code for.
    pub target: Target,

    /// The garbage collection mode.
    pub gc: GcMode,

    /// If automatic reference counting is enabled.
    pub arc: bool,

    /// If computed ivar and block layouts should be printed to STDOUT.
    pub print_layouts: bool,

    /// How to handle identifier hash collisions.
    pub collisions: CollisionPolicy,

    /// If the LLVM module should be verified before it's written.
    pub verify_llvm: bool,

    /// The path to write textual LLVM IR to.
    pub llvm_ir: Option<PathBuf>,

    /// The path to write the object file to.
    pub output: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Config {
        Config {
            target: Target::native(),
            gc: GcMode::None,
            arc: false,
            print_layouts: false,
            collisions: CollisionPolicy::Warn,
            verify_llvm: false,
            llvm_ir: None,
            output: None,
        }
    }

    pub fn set_target(&mut self, name: &str) -> Result<(), String> {
        if let Some(val) = Target::parse(name) {
            self.target = val;
            Ok(())
        } else {
            Err(format!("The target '{}' isn't supported", name))
        }
    }

    pub fn set_gc(&mut self, name: &str) -> Result<(), String> {
        if let Some(val) = GcMode::from_str(name) {
            self.gc = val;
            Ok(())
        } else {
            Err(format!("The garbage collection mode '{}' is invalid", name))
        }
    }

    pub fn set_collisions(&mut self, name: &str) -> Result<(), String> {
        if let Some(val) = CollisionPolicy::from_str(name) {
            self.collisions = val;
            Ok(())
        } else {
            Err(format!("The collision policy '{}' is invalid", name))
        }
    }

    /// Returns the size of a word (pointer) in bytes for the current target.
    pub fn word_size(&self) -> u32 {
        self.target.pointer_width()
    }

    /// Returns `true` if layouts for the conservative collector or reference
    /// counting should be produced.
    pub(crate) fn needs_layouts(&self) -> bool {
        self.gc.is_enabled() || self.arc
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new();

        assert_eq!(config.gc, GcMode::None);
        assert!(!config.arc);
        assert!(!config.needs_layouts());
        assert_eq!(config.collisions, CollisionPolicy::Warn);
    }

    #[test]
    fn test_config_set_target() {
        let mut config = Config::new();

        assert!(config.set_target("i386-linux-gnu").is_ok());
        assert_eq!(config.word_size(), 4);
        assert!(config.set_target("foo").is_err());
    }

    #[test]
    fn test_config_set_gc() {
        let mut config = Config::new();

        assert!(config.set_gc("only").is_ok());
        assert_eq!(config.gc, GcMode::Only);
        assert!(config.needs_layouts());
        assert!(config.set_gc("sometimes").is_err());
    }

    #[test]
    fn test_config_set_collisions() {
        let mut config = Config::new();

        assert!(config.set_collisions("error").is_ok());
        assert_eq!(config.collisions, CollisionPolicy::Error);
        assert!(config.set_collisions("panic").is_err());
    }
}
