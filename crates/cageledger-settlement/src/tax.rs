//! Consumption tax and final net derivations
//!
//! Both functions are pure over [`SettlementDetails`] and the withdrawal the
//! player requested at checkout; commit calls them inside its transaction,
//! previews call them freely.

use cageledger_types::{Amount, Result};

use crate::aggregate::SettlementDetails;

/// Consumption tax owed at checkout.
///
/// The taxable net is the player's ring and tournament winnings minus web
/// buy-ins, plus whatever they withdraw from their web-coin savings. A
/// non-negative net means the house owes the player and no tax applies; a
/// negative net is a service consumed, taxed at `tax_rate_bps` of its
/// magnitude (truncating).
pub fn calc_consumption_tax(
    details: &SettlementDetails,
    web_coin_withdraw: Amount,
    tax_rate_bps: u32,
) -> Result<Amount> {
    let net = details
        .web_ring
        .total_cash_out
        .checked_sub(details.web_ring.total_buy_in)?
        .checked_add(details.tournament.prize_total)?
        .checked_add(web_coin_withdraw)?;

    if net.is_positive() {
        return Ok(Amount::ZERO);
    }
    net.abs().basis_points(tax_rate_bps)
}

/// Final amount owed at checkout.
///
/// Positive means the house pays the player; negative means the player pays
/// the house. Income is cash-outs, prizes, and the withdrawn savings; expense
/// is web buy-ins, tournament charges, in-store fees, and the tax.
pub fn calc_final_net_amount(
    details: &SettlementDetails,
    web_coin_withdraw: Amount,
    consumption_tax: Amount,
) -> Result<Amount> {
    let income = details
        .web_ring
        .total_cash_out
        .checked_add(details.tournament.prize_total)?
        .checked_add(web_coin_withdraw)?;

    let expense = details
        .web_ring
        .total_buy_in
        .checked_add(details.tournament.charge_total)?
        .checked_add(details.in_store.total_buy_in_fee)?
        .checked_add(details.in_store.withdraw_fee)?
        .checked_add(consumption_tax)?;

    income.checked_sub(expense)
}
