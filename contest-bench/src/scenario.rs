use std::fmt;
use std::str::FromStr;

use anyhow::Result;

use crate::error::SetupError;
use crate::web_client::WebClient;

const A_PLUS_B: &str = r#"#include <iostream>
int main() {
  int a, b;
  std::cin >> a >> b;
  std::cout << a + b << std::endl;
}"#;

/// Operation each worker repeats during the timed phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Scenario {
    AcmMonitor,
    SchoolFinalMonitor,
    MySchoolFinalSubmits,
    /// Submits an "A+B" solution to problem A.
    SubmitA,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::AcmMonitor,
        Scenario::SchoolFinalMonitor,
        Scenario::MySchoolFinalSubmits,
        Scenario::SubmitA,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Scenario::AcmMonitor => "AcmMonitor",
            Scenario::SchoolFinalMonitor => "SchoolFinalMonitor",
            Scenario::MySchoolFinalSubmits => "MySchoolFinalSubmits",
            Scenario::SubmitA => "SubmitA",
        }
    }

    /// Scenario names in alphabetical order.
    #[must_use]
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<_> = Self::ALL.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names
    }

    pub async fn run(self, client: &mut WebClient) -> Result<()> {
        match self {
            Scenario::AcmMonitor => client.acm_monitor().await.map(drop),
            Scenario::SchoolFinalMonitor => client.school_final_monitor().await.map(drop),
            Scenario::MySchoolFinalSubmits => client.my_school_final_submits().await.map(drop),
            Scenario::SubmitA => client.submit("A", "C++ 11", A_PLUS_B).await,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| SetupError::UnknownScenario {
                name: s.to_string(),
                supported: Self::names().join(", "),
            })
    }
}
