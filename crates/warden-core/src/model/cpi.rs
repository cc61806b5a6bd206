use crate::source_location::SourceSpan;
use serde::{Deserialize, Serialize};

const FUND_MOVING_CALLEES: &[&str] = &["transfer", "mint_to", "burn", "withdraw", "close_account"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CpiTarget {
    /// Program account declared as `Program<'info, T>`.
    Typed { account: String, program: String },
    Unverified {
        account: Option<String>,
        expr: String,
    },
}

impl CpiTarget {
    pub fn account(&self) -> Option<&str> {
        match self {
            CpiTarget::Typed { account, .. } => Some(account),
            CpiTarget::Unverified { account, .. } => account.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpiStyle {
    CpiContext,
    Invoke,
    InvokeSigned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardedAccount {
    pub name: String,
    pub writable: bool,
    pub signer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpiCall {
    pub instruction: String,
    pub callee: String,
    pub style: CpiStyle,
    pub target: CpiTarget,
    pub forwarded: Vec<ForwardedAccount>,
    pub signer_seeds: Option<Vec<String>>,
    /// Index of the call among the instruction's operations.
    pub op_index: usize,
    pub mutations_before: usize,
    pub mutations_after: usize,
    pub span: SourceSpan,
    pub line: u32,
}

impl CpiCall {
    pub fn moves_funds(&self) -> bool {
        let callee = self.callee.to_ascii_lowercase();
        FUND_MOVING_CALLEES.iter().any(|k| callee.contains(k))
    }

    pub fn is_pda_signed(&self) -> bool {
        self.signer_seeds.is_some()
    }

    pub fn forwards(&self, account: &str) -> bool {
        self.forwarded.iter().any(|f| f.name == account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fund_moving_callee() {
        let call = CpiCall {
            instruction: "withdraw".into(),
            callee: "token::transfer".into(),
            style: CpiStyle::CpiContext,
            target: CpiTarget::Typed {
                account: "token_program".into(),
                program: "Token".into(),
            },
            forwarded: vec![ForwardedAccount {
                name: "vault".into(),
                writable: true,
                signer: false,
            }],
            signer_seeds: None,
            op_index: 0,
            mutations_before: 0,
            mutations_after: 0,
            span: SourceSpan::default(),
            line: 1,
        };
        assert!(call.moves_funds());
        assert!(call.forwards("vault"));
        assert!(!call.is_pda_signed());
        assert_eq!(call.target.account(), Some("token_program"));
    }
}
