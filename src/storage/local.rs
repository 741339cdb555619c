//! 本地回退存储
//!
//! 远端不可用时图像写入本地目录。目录规则：
//! - Windows：`Documents\nano-banana-images`
//! - POSIX：工作目录下 `generated_imgs`；若工作目录位于系统路径
//!   （/usr、/opt、/var），改用 `$HOME/nano-banana-images`
//!
//! 每次写入前都递归建目录（目录可能被外部删除）。

use std::path::{Path, PathBuf};

/// HOME 下 / Documents 下的回退目录名
pub const FALLBACK_DIR_NAME: &str = "nano-banana-images";

/// 工作目录下的子目录名
pub const CWD_SUBDIR: &str = "generated_imgs";

const SYSTEM_PREFIXES: &[&str] = &["/usr", "/opt", "/var"];

/// 计算当前进程的回退目录
pub fn fallback_dir() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    if cfg!(windows) {
        let home = std::env::var_os("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or(cwd);
        home.join("Documents").join(FALLBACK_DIR_NAME)
    } else {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        resolve_posix_dir(&cwd, home.as_deref())
    }
}

/// POSIX 目录规则（纯函数，便于测试）
fn resolve_posix_dir(cwd: &Path, home: Option<&Path>) -> PathBuf {
    let in_system_path = SYSTEM_PREFIXES
        .iter()
        .any(|prefix| cwd.starts_with(prefix));
    match (in_system_path, home) {
        (true, Some(home)) => home.join(FALLBACK_DIR_NAME),
        _ => cwd.join(CWD_SUBDIR),
    }
}

/// 落盘：建目录 + 写文件，返回完整路径；I/O 失败向上传播
pub async fn save_image(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}
