/// Setup status persisted across app restarts.
///
/// 设置流程持久化状态。
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SetupStatus {
    pub has_completed: bool,
}

impl SetupStatus {
    pub fn completed() -> Self {
        Self {
            has_completed: true,
        }
    }
}
