//! PayloadCodec - JSON 入出力と型付きペイロードの相互変換

use serde::Serialize;
use serde_json::Value;

use super::task::TaskPayload;
use crate::domain::SchedulerError;

/// CodecError は変換失敗
///
/// どちらも再試行しても直らないので、SchedulerError では InvalidInput になる。
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to decode input of '{task}': {source}")]
    Decode {
        task: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value of '{task}': {source}")]
    Encode {
        task: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl From<CodecError> for SchedulerError {
    fn from(err: CodecError) -> Self {
        SchedulerError::invalid_input(err.to_string())
    }
}

/// PayloadCodec は serde_json による変換をまとめたもの
pub struct PayloadCodec;

impl PayloadCodec {
    pub fn decode<T: TaskPayload>(input: &Value) -> Result<T, CodecError> {
        T::deserialize(input).map_err(|source| CodecError::Decode {
            task: T::NAME,
            source,
        })
    }

    /// 投入用の JSON 入力を作る
    pub fn encode<T: TaskPayload>(payload: &T) -> Result<Value, CodecError> {
        Self::to_value::<T, T>(payload)
    }

    /// Handler の出力を TaskInstance::result 用に変換
    pub fn encode_output<T: TaskPayload>(output: &T::Output) -> Result<Value, CodecError> {
        Self::to_value::<T, T::Output>(output)
    }

    fn to_value<T: TaskPayload, V: Serialize>(value: &V) -> Result<Value, CodecError> {
        serde_json::to_value(value).map_err(|source| CodecError::Encode {
            task: T::NAME,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::task::fixtures::Add;
    use serde_json::json;

    #[test]
    fn decode_reports_task_name() {
        let err = PayloadCodec::decode::<Add>(&json!({"a": 1})).unwrap_err();
        assert!(matches!(err, CodecError::Decode { task: "math.add", .. }));
        assert!(matches!(
            SchedulerError::from(err),
            SchedulerError::InvalidInput(_)
        ));
    }

    #[test]
    fn encode_then_decode() {
        let input = PayloadCodec::encode(&Add { a: 2, b: 3 }).unwrap();
        assert_eq!(input, json!({"a": 2, "b": 3}));
        assert_eq!(
            PayloadCodec::decode::<Add>(&input).unwrap(),
            Add { a: 2, b: 3 }
        );
    }
}
