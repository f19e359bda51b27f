// Repository trait for robot metadata served by the REST backend
use crate::domain::robot::RobotInfo;
use async_trait::async_trait;

#[async_trait]
pub trait RobotDirectory: Send + Sync {
    /// All robots visible to the current user
    async fn list_robots(&self) -> anyhow::Result<Vec<RobotInfo>>;

    /// Metadata for one robot, including its minimum battery charge
    async fn get_robot(&self, robot_id: &str) -> anyhow::Result<RobotInfo>;
}
