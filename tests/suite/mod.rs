mod launch;
mod ledger;
mod reconcile;
