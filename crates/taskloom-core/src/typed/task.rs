//! TaskPayload trait - 型付きタスク入力の定義
//!
//! # 学習ポイント
//! - Associated Constants (`const NAME`)
//! - Associated Types (`type Output`)

use serde::Serialize;
use serde::de::DeserializeOwned;

/// TaskPayload はタスク名・入力型・出力型を対応付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Resize {
///     width: u32,
///     height: u32,
/// }
///
/// impl TaskPayload for Resize {
///     const NAME: &'static str = "image.resize";
///     type Output = ResizeResult;
/// }
/// ```
///
/// # Trait Bounds
/// - `DeserializeOwned`: JSON 入力からの復元
/// - `Serialize`: 投入側で JSON 入力に変換
/// - `Send + Sync + 'static`: タスク本体は spawn された tokio タスクで動く
pub trait TaskPayload: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// TaskDefinition の name になる
    const NAME: &'static str;

    /// 実行結果。TaskInstance::result に JSON として保存される
    type Output: Serialize + Send + 'static;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde::{Deserialize, Serialize};

    use super::TaskPayload;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Add {
        pub a: i64,
        pub b: i64,
    }

    impl TaskPayload for Add {
        const NAME: &'static str = "math.add";
        type Output = i64;
    }
}
