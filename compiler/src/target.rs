use std::fmt;

/// The supported CPU architectures.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Architecture {
    Amd64,
    Arm64,
    I386,
    Arm,
}

impl Architecture {
    pub(crate) fn from_str(input: &str) -> Option<Architecture> {
        match input {
            "amd64" => Some(Architecture::Amd64),
            "arm64" => Some(Architecture::Arm64),
            "i386" => Some(Architecture::I386),
            "arm" => Some(Architecture::Arm),
            _ => None,
        }
    }

    pub(crate) fn native() -> Architecture {
        if cfg!(target_arch = "x86_64") {
            Architecture::Amd64
        } else if cfg!(target_arch = "aarch64") {
            Architecture::Arm64
        } else if cfg!(target_arch = "x86") {
            Architecture::I386
        } else if cfg!(target_arch = "arm") {
            Architecture::Arm
        } else {
            panic!("The host architecture isn't supported");
        }
    }

    /// Returns the size of a pointer in bytes.
    pub(crate) fn pointer_width(self) -> u32 {
        match self {
            Architecture::Amd64 | Architecture::Arm64 => 8,
            Architecture::I386 | Architecture::Arm => 4,
        }
    }

    pub(crate) fn is_x86(self) -> bool {
        matches!(self, Architecture::Amd64 | Architecture::I386)
    }
}

/// The supported operating systems.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OperatingSystem {
    Freebsd,
    Linux,
    Mac,
    Ios,
}

impl OperatingSystem {
    pub(crate) fn from_str(input: &str) -> Option<OperatingSystem> {
        match input {
            "freebsd" => Some(OperatingSystem::Freebsd),
            "linux" => Some(OperatingSystem::Linux),
            "mac" => Some(OperatingSystem::Mac),
            "ios" => Some(OperatingSystem::Ios),
            _ => None,
        }
    }

    pub(crate) fn native() -> OperatingSystem {
        if cfg!(target_os = "freebsd") {
            OperatingSystem::Freebsd
        } else if cfg!(target_os = "linux") {
            OperatingSystem::Linux
        } else if cfg!(target_os = "macos") {
            OperatingSystem::Mac
        } else if cfg!(target_os = "ios") {
            OperatingSystem::Ios
        } else {
            panic!("The host operating system isn't supported");
        }
    }
}

/// The ABI to target.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Abi {
    Native,
    Gnu,
    Musl,
}

impl Abi {
    pub(crate) fn from_str(input: &str) -> Option<Abi> {
        match input {
            "native" => Some(Abi::Native),
            "gnu" => Some(Abi::Gnu),
            "musl" => Some(Abi::Musl),
            _ => None,
        }
    }

    pub(crate) fn native() -> Abi {
        if cfg!(target_env = "gnu") {
            Abi::Gnu
        } else if cfg!(target_env = "musl") {
            Abi::Musl
        } else {
            Abi::Native
        }
    }

    pub(crate) fn is_musl(&self) -> bool {
        matches!(self, Abi::Musl)
    }
}

/// A type describing the compile target, such as the operating system and
/// architecture.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Target {
    pub arch: Architecture,
    pub os: OperatingSystem,
    pub abi: Abi,
}

impl Target {
    /// Returns a list of all the targets we officially support.
    pub fn supported() -> Vec<Target> {
        use Abi::*;
        use Architecture::*;
        use OperatingSystem::*;

        vec![
            Target::new(Amd64, Freebsd, Native),
            Target::new(Amd64, Linux, Gnu),
            Target::new(Amd64, Linux, Musl),
            Target::new(Arm64, Linux, Gnu),
            Target::new(Arm64, Linux, Musl),
            Target::new(I386, Linux, Gnu),
            Target::new(Arm, Linux, Gnu),
            Target::new(Amd64, Mac, Native),
            Target::new(Arm64, Mac, Native),
            Target::new(Arm64, Ios, Native),
            Target::new(Amd64, Ios, Native),
        ]
    }

    pub fn new(arch: Architecture, os: OperatingSystem, abi: Abi) -> Target {
        Target { arch, os, abi }
    }

    /// Parses a target from a string.
    ///
    /// If the target is invalid, a None is returned.
    pub fn parse(input: &str) -> Option<Target> {
        let mut iter = input.split('-');
        let arch = iter.next().and_then(Architecture::from_str)?;
        let os = iter.next().and_then(OperatingSystem::from_str)?;
        let abi = iter.next().and_then(Abi::from_str)?;

        Some(Target { arch, os, abi })
    }

    /// Returns the target for the current platform.
    pub fn native() -> Target {
        Target {
            arch: Architecture::native(),
            os: OperatingSystem::native(),
            abi: Abi::native(),
        }
    }

    /// Returns a String describing the target using the LLVM triple format.
    pub(crate) fn llvm_triple(&self) -> String {
        let arch = match self.arch {
            Architecture::Amd64 => "x86_64",
            Architecture::Arm64 => "aarch64",
            Architecture::I386 => "i386",
            Architecture::Arm => "armv7",
        };

        let os = match self.os {
            OperatingSystem::Freebsd => "unknown-freebsd",
            OperatingSystem::Mac => "apple-darwin",
            OperatingSystem::Ios if self.is_simulator() => {
                "apple-ios-simulator"
            }
            OperatingSystem::Ios => "apple-ios",
            OperatingSystem::Linux if self.abi.is_musl() => "linux-musl",
            OperatingSystem::Linux if self.arch == Architecture::Arm => {
                "linux-gnueabihf"
            }
            OperatingSystem::Linux => "linux-gnu",
        };

        format!("{}-{}", arch, os)
    }

    pub(crate) fn arch_name(&self) -> &'static str {
        match self.arch {
            Architecture::Amd64 => "amd64",
            Architecture::Arm64 => "arm64",
            Architecture::I386 => "i386",
            Architecture::Arm => "arm",
        }
    }

    pub(crate) fn os_name(&self) -> &'static str {
        match self.os {
            OperatingSystem::Freebsd => "freebsd",
            OperatingSystem::Mac => "mac",
            OperatingSystem::Ios => "ios",
            OperatingSystem::Linux => "linux",
        }
    }

    pub(crate) fn abi_name(&self) -> &'static str {
        match self.abi {
            Abi::Native => match self.os {
                OperatingSystem::Linux => {
                    if cfg!(target_env = "musl") {
                        "musl"
                    } else {
                        "gnu"
                    }
                }
                _ => "native",
            },
            Abi::Gnu => "gnu",
            Abi::Musl => "musl",
        }
    }

    pub fn is_native(&self) -> bool {
        self == &Target::native()
    }

    /// Returns the size of a pointer (the word size) in bytes.
    pub fn pointer_width(&self) -> u32 {
        self.arch.pointer_width()
    }

    /// Returns the size of the C library's `jmp_buf` type in 32 bits units.
    pub(crate) fn jmp_buf_size(&self) -> u32 {
        use Architecture::*;
        use OperatingSystem::*;

        match (self.os, self.arch) {
            (Mac | Ios, Amd64) => 37,
            (Mac | Ios, Arm64) => 48,
            (Mac | Ios, Arm) => 28,
            (Mac | Ios, I386) => 18,
            (Freebsd, _) => 24,
            (Linux, Amd64) => 50,
            (Linux, Arm64) => 78,
            (Linux, I386) => 39,
            (Linux, Arm) => 98,
        }
    }

    /// Returns `true` if the target is the iOS simulator, which runs iOS code
    /// on an x86 host.
    pub fn is_simulator(&self) -> bool {
        self.os == OperatingSystem::Ios && self.arch.is_x86()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{}-{}-{}",
            self.arch_name(),
            self.os_name(),
            self.abi_name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operating_system_from_str() {
        assert_eq!(
            OperatingSystem::from_str("freebsd"),
            Some(OperatingSystem::Freebsd)
        );
        assert_eq!(
            OperatingSystem::from_str("linux"),
            Some(OperatingSystem::Linux)
        );
        assert_eq!(
            OperatingSystem::from_str("mac"),
            Some(OperatingSystem::Mac)
        );
        assert_eq!(
            OperatingSystem::from_str("ios"),
            Some(OperatingSystem::Ios)
        );
        assert_eq!(OperatingSystem::from_str("bla"), None);
    }

    #[test]
    fn test_architecture_from_str() {
        assert_eq!(Architecture::from_str("amd64"), Some(Architecture::Amd64));
        assert_eq!(Architecture::from_str("arm64"), Some(Architecture::Arm64));
        assert_eq!(Architecture::from_str("i386"), Some(Architecture::I386));
        assert_eq!(Architecture::from_str("bla"), None);
    }

    #[test]
    fn test_target_parse() {
        assert_eq!(
            Target::parse("amd64-freebsd-native"),
            Some(Target::new(
                Architecture::Amd64,
                OperatingSystem::Freebsd,
                Abi::Native
            ))
        );
        assert_eq!(
            Target::parse("arm64-linux-gnu"),
            Some(Target::new(
                Architecture::Arm64,
                OperatingSystem::Linux,
                Abi::Gnu
            ))
        );
        assert_eq!(
            Target::parse("amd64-ios-native"),
            Some(Target::new(
                Architecture::Amd64,
                OperatingSystem::Ios,
                Abi::Native
            ))
        );

        assert_eq!(Target::parse("bla-linux-native"), None);
        assert_eq!(Target::parse("amd64-bla-native"), None);
        assert_eq!(Target::parse("amd64-linux"), None);
    }

    #[test]
    fn test_target_host() {
        let target = Target::native();

        assert_eq!(target.arch, Architecture::native());
        assert_eq!(target.os, OperatingSystem::native());
    }

    #[test]
    fn test_target_llvm_triple() {
        assert_eq!(
            Target::new(Architecture::Amd64, OperatingSystem::Linux, Abi::Gnu)
                .llvm_triple(),
            "x86_64-linux-gnu"
        );
        assert_eq!(
            Target::new(Architecture::Amd64, OperatingSystem::Linux, Abi::Musl)
                .llvm_triple(),
            "x86_64-linux-musl"
        );
        assert_eq!(
            Target::new(
                Architecture::Amd64,
                OperatingSystem::Freebsd,
                Abi::Native
            )
            .llvm_triple(),
            "x86_64-unknown-freebsd"
        );
        assert_eq!(
            Target::new(Architecture::Arm64, OperatingSystem::Mac, Abi::Native)
                .llvm_triple(),
            "aarch64-apple-darwin"
        );
        assert_eq!(
            Target::new(Architecture::I386, OperatingSystem::Ios, Abi::Native)
                .llvm_triple(),
            "i386-apple-ios-simulator"
        );
    }

    #[test]
    fn test_target_pointer_width() {
        let width = |name| Target::parse(name).unwrap().pointer_width();

        assert_eq!(width("amd64-linux-gnu"), 8);
        assert_eq!(width("i386-linux-gnu"), 4);
        assert_eq!(width("arm-linux-gnu"), 4);
    }

    #[test]
    fn test_target_is_simulator() {
        assert!(Target::parse("amd64-ios-native").unwrap().is_simulator());
        assert!(Target::parse("i386-ios-native").unwrap().is_simulator());
        assert!(!Target::parse("arm64-ios-native").unwrap().is_simulator());
        assert!(!Target::parse("amd64-mac-native").unwrap().is_simulator());
    }

    #[test]
    fn test_target_jmp_buf_size() {
        let size = |name| Target::parse(name).unwrap().jmp_buf_size();

        assert_eq!(size("amd64-linux-gnu"), 50);
        assert_eq!(size("i386-ios-native"), 18);
    }

    #[test]
    fn test_target_to_string() {
        assert_eq!(
            Target::new(Architecture::Amd64, OperatingSystem::Linux, Abi::Gnu)
                .to_string(),
            "amd64-linux-gnu"
        );
        assert_eq!(
            Target::new(Architecture::Arm64, OperatingSystem::Ios, Abi::Native)
                .to_string(),
            "arm64-ios-native"
        );
    }
}
