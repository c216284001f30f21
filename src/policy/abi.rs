//! Call surface of the policy-gated token.

use alloy::sol;

sol! {
    /// Sentinel token: an ERC-20 whose transfers are vetted by an external
    /// policy engine.
    #[derive(Debug, PartialEq, Eq)]
    interface ISentinelToken {
        function balanceOf(address account) external view returns (uint256);
        function getUserData(address user) external view returns (bool whitelisted, uint256 trustScore);
        function isConnected() external view returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function whitelistUser(address user) external;
        function revokeUser(address user) external;
        function updateUserScore(address user, uint256 score) external;
        function connectToRust(address engine) external;
    }
}
