//! Default configuration values

/// Default toolchain (SDK) image used for the container fallback
pub const DEFAULT_SDK: &str = "cartesi/sdk:0.12.0-alpha.0";

/// Default machine RAM length
pub const DEFAULT_RAM_LENGTH: &str = "128Mi";

/// Kernel image shipped by the Linux packages and the SDK image
pub const DEFAULT_RAM_IMAGE_LINUX: &str = "/usr/share/cartesi-machine/images/linux.bin";

/// Kernel image installed by Homebrew
pub const DEFAULT_RAM_IMAGE_MAC: &str = "/opt/homebrew/share/cartesi-machine/images/linux.bin";

/// Default snapshot store, relative to the context directory
pub const DEFAULT_STORE: &str = "image";

/// Default docker build context
pub const DEFAULT_CONTEXT: &str = ".";

/// Default Dockerfile
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Configuration file name
pub const CONFIG_FILE: &str = "cartesi.toml";

/// Context directory holding drives and the snapshot
pub const CONTEXT_DIR: &str = ".cartesi";

/// Name of the drive supplying the root filesystem
pub const ROOT_DRIVE: &str = "root";

/// ext2 block size (fixed at 4k)
pub const BLOCK_SIZE: u64 = 4096;

/// squashfs compression algorithm
pub const SQUASHFS_COMPRESSION: &str = "lzo";

/// Architecture every application image must report
pub const REQUIRED_ARCHITECTURE: &str = "riscv64";

/// Platform passed to `docker buildx build`
pub const DOCKER_PLATFORM: &str = "linux/riscv64";

/// Working directory of fallback containers
pub const CONTAINER_WORKDIR: &str = "/work";

/// Image label prefix
pub const LABEL_PREFIX: &str = "io.cartesi.rollups";

/// Minimum SDK version accepted from the image label
pub const MIN_SDK_VERSION: &str = "0.6.0";

/// Default shell used by `cartesi-build shell`
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Platform-appropriate kernel image path
pub fn default_ram_image() -> &'static str {
    if cfg!(target_os = "macos") {
        DEFAULT_RAM_IMAGE_MAC
    } else {
        DEFAULT_RAM_IMAGE_LINUX
    }
}
