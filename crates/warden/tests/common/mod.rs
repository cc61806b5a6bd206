#![allow(dead_code)]

/// Fund-moving instruction whose authority is a raw, unsigned account.
pub const UNSIGNED_WITHDRAW: &str = r#"
use anchor_lang::prelude::*;

declare_id!("Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS");

#[program]
pub mod vault {
    use super::*;

    pub fn withdraw(ctx: Context<Withdraw>, amount: u64) -> Result<()> {
        let vault = &mut ctx.accounts.vault;
        vault.balance = vault.balance.checked_sub(amount).ok_or(VaultError::Overflow)?;
        emit!(Withdrawn { amount });
        Ok(())
    }
}

#[derive(Accounts)]
pub struct Withdraw<'info> {
    #[account(mut)]
    pub vault: Account<'info, Vault>,
    /// CHECK: compared against vault.authority
    pub authority: AccountInfo<'info>,
}

#[account]
pub struct Vault {
    pub authority: Pubkey,
    pub balance: u64,
}

#[event]
pub struct Withdrawn {
    pub amount: u64,
}
"#;

/// Same instruction without the event.
pub const SILENT_WITHDRAW: &str = r#"
use anchor_lang::prelude::*;

#[program]
pub mod vault {
    use super::*;

    pub fn withdraw(ctx: Context<Withdraw>, amount: u64) -> Result<()> {
        let vault = &mut ctx.accounts.vault;
        vault.balance = vault.balance.checked_sub(amount).ok_or(VaultError::Overflow)?;
        Ok(())
    }
}

#[derive(Accounts)]
pub struct Withdraw<'info> {
    #[account(mut)]
    pub vault: Account<'info, Vault>,
    /// CHECK: compared against vault.authority
    pub authority: AccountInfo<'info>,
}

#[account]
pub struct Vault {
    pub authority: Pubkey,
    pub balance: u64,
}
"#;

/// Properly signed deposit with raw arithmetic on the balance.
pub const RAW_DEPOSIT: &str = r#"
use anchor_lang::prelude::*;

#[program]
pub mod vault {
    use super::*;

    pub fn deposit(ctx: Context<Deposit>, amount: u64) -> Result<()> {
        let vault = &mut ctx.accounts.vault;
        vault.balance = vault.balance + amount * 2;
        emit!(Deposited { amount });
        Ok(())
    }
}

#[derive(Accounts)]
pub struct Deposit<'info> {
    #[account(mut, has_one = authority)]
    pub vault: Account<'info, Vault>,
    pub authority: Signer<'info>,
}

#[account]
pub struct Vault {
    pub authority: Pubkey,
    pub balance: u64,
}

#[event]
pub struct Deposited {
    pub amount: u64,
}
"#;

/// Constraint PDA seeded with an unbounded caller string and a bare bump.
pub const USER_SEEDED_PROFILE: &str = r#"
use anchor_lang::prelude::*;

#[program]
pub mod profiles {
    use super::*;

    pub fn update_profile(ctx: Context<UpdateProfile>, name: String, bio: String) -> Result<()> {
        let profile = &mut ctx.accounts.profile;
        profile.bio = bio;
        emit!(ProfileUpdated { name });
        Ok(())
    }
}

#[derive(Accounts)]
#[instruction(name: String)]
pub struct UpdateProfile<'info> {
    #[account(
        mut,
        has_one = owner,
        seeds = [b"profile", owner.key().as_ref(), name.as_bytes()],
        bump
    )]
    pub profile: Account<'info, Profile>,
    pub owner: Signer<'info>,
}

#[account]
pub struct Profile {
    pub owner: Pubkey,
    pub bio: String,
    pub bump: u8,
}

#[event]
pub struct ProfileUpdated {
    pub name: String,
}
"#;

/// `count` copies of the unsigned withdraw, each with its own context.
pub fn unsigned_withdrawals(count: usize) -> String {
    let mut handlers = String::new();
    let mut contexts = String::new();
    for i in 0..count {
        handlers.push_str(&format!(
            r#"
    pub fn withdraw_{i}(ctx: Context<Withdraw{i}>, amount: u64) -> Result<()> {{
        let vault = &mut ctx.accounts.vault;
        vault.balance = vault.balance.checked_sub(amount).ok_or(VaultError::Overflow)?;
        emit!(Withdrawn {{ amount }});
        Ok(())
    }}
"#
        ));
        contexts.push_str(&format!(
            r#"
#[derive(Accounts)]
pub struct Withdraw{i}<'info> {{
    #[account(mut)]
    pub vault: Account<'info, Vault>,
    /// CHECK: compared against vault.authority
    pub authority: AccountInfo<'info>,
}}
"#
        ));
    }
    format!(
        r#"
use anchor_lang::prelude::*;

#[program]
pub mod vault {{
    use super::*;
{handlers}}}
{contexts}
#[account]
pub struct Vault {{
    pub authority: Pubkey,
    pub balance: u64,
}}
"#
    )
}

/// Two mutable vaults of one type moved between by a signer that neither
/// vault is tied to.
pub const REBALANCE: &str = r#"
use anchor_lang::prelude::*;

#[program]
pub mod vault {
    use super::*;

    pub fn rebalance(ctx: Context<Rebalance>, amount: u64) -> Result<()> {
        let from = &mut ctx.accounts.from;
        from.balance = from.balance.checked_sub(amount).ok_or(VaultError::Overflow)?;
        let to = &mut ctx.accounts.to;
        to.balance = to.balance.checked_add(amount).ok_or(VaultError::Overflow)?;
        emit!(Rebalanced { amount });
        Ok(())
    }
}

#[derive(Accounts)]
pub struct Rebalance<'info> {
    #[account(mut)]
    pub from: Account<'info, Vault>,
    #[account(mut)]
    pub to: Account<'info, Vault>,
    pub authority: Signer<'info>,
}

#[account]
pub struct Vault {
    pub authority: Pubkey,
    pub balance: u64,
}

#[event]
pub struct Rebalanced {
    pub amount: u64,
}
"#;

/// Same context where only `from` is written, so `to` keeps a needless `mut`.
pub const ONE_SIDED_REBALANCE: &str = r#"
use anchor_lang::prelude::*;

#[program]
pub mod vault {
    use super::*;

    pub fn rebalance(ctx: Context<Rebalance>, amount: u64) -> Result<()> {
        let from = &mut ctx.accounts.from;
        from.balance = from.balance.checked_sub(amount).ok_or(VaultError::Overflow)?;
        emit!(Rebalanced { amount });
        Ok(())
    }
}

#[derive(Accounts)]
pub struct Rebalance<'info> {
    #[account(mut, has_one = authority)]
    pub from: Account<'info, Vault>,
    #[account(mut)]
    pub to: Account<'info, Vault>,
    pub authority: Signer<'info>,
}

#[account]
pub struct Vault {
    pub authority: Pubkey,
    pub balance: u64,
}

#[event]
pub struct Rebalanced {
    pub amount: u64,
}
"#;

/// Raw oracle account next to a position that can be closed.
pub const CLOSABLE_POSITION: &str = r#"
use anchor_lang::prelude::*;

#[program]
pub mod positions {
    use super::*;

    pub fn close_position(ctx: Context<ClosePosition>) -> Result<()> {
        emit!(PositionClosed { owner: ctx.accounts.authority.key() });
        Ok(())
    }
}

#[derive(Accounts)]
pub struct ClosePosition<'info> {
    #[account(mut, has_one = authority, close = authority)]
    pub position: Account<'info, Position>,
    /// CHECK: price feed, read only
    pub oracle: AccountInfo<'info>,
    #[account(mut)]
    pub authority: Signer<'info>,
}

#[account]
pub struct Position {
    pub authority: Pubkey,
    pub size: u64,
}

#[event]
pub struct PositionClosed {
    pub owner: Pubkey,
}
"#;

/// Initializer that accepts an existing account and emits nothing.
pub const REINITIALIZABLE_COUNTER: &str = r#"
use anchor_lang::prelude::*;

#[program]
pub mod counter {
    use super::*;

    pub fn initialize(ctx: Context<Initialize>) -> Result<()> {
        let counter = &mut ctx.accounts.counter;
        counter.count = 0;
        Ok(())
    }
}

#[derive(Accounts)]
pub struct Initialize<'info> {
    #[account(init_if_needed, payer = payer, space = 8 + Counter::INIT_SPACE)]
    pub counter: Account<'info, Counter>,
    #[account(mut)]
    pub payer: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[account]
#[derive(InitSpace)]
pub struct Counter {
    pub count: u64,
}

#[event]
pub struct CounterReset {
    pub count: u64,
}
"#;
