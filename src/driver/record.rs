//! Record - 결과 레코드
//!
//! RECORD 메시지의 값과 RUN 요약의 필드 이름을 묶은 것입니다. 한 결과의 모든
//! 레코드는 같은 키 목록을 공유합니다.

use std::fmt;
use std::sync::Arc;

use crate::bolt::Value;

// ============================================================================
// Record
// ============================================================================

/// 쿼리 결과 레코드
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 컬럼 키 (결과의 모든 레코드가 공유)
    keys: Arc<[String]>,
    /// 값 (`keys`와 같은 순서)
    values: Vec<Value>,
}

impl Record {
    pub fn new(keys: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { keys, values }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 컬럼 이름으로 값 조회
    pub fn get(&self, key: &str) -> Option<&Value> {
        let index = self.keys.iter().position(|k| k == key)?;
        self.values.get(index)
    }

    /// 위치로 값 조회
    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .keys
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| format!("{}: {:?}", k, v))
            .collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::iter::Zip<std::slice::Iter<'a, String>, std::slice::Iter<'a, Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter().zip(self.values.iter())
    }
}

// ============================================================================
// Tests
// ============================================================================
