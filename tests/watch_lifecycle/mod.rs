mod failure_test;
mod leased_test;
mod versioned_test;
