//! Automation network bindings: task submission/cancellation, the registry and the proxy's
//! module list.
//!
//! Struct layouts must match the core contract exactly; a cancel payload is the receipt
//! re-encoded field for field.

use alloy_sol_types::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct Provider {
        address addr;
        address module;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Condition {
        address inst;
        bytes data;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Action {
        address addr;
        bytes data;
        uint8 operation;
        uint8 dataFlow;
        uint256 value;
        bool termsOkCheck;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Task {
        Condition[] conditions;
        Action[] actions;
        uint256 selfProviderGasLimit;
        uint256 selfProviderGasPriceCeil;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct TaskReceipt {
        uint256 id;
        address userProxy;
        Provider provider;
        uint256 index;
        Task[] tasks;
        uint256 expiryDate;
        uint256 cycleId;
        uint256 submissionsLeft;
    }

    interface IAutomationCore {
        function submitTask(Provider _provider, Task _task, uint256 _expiryDate) external;
        function cancelTask(TaskReceipt _TR) external;
    }

    interface IActionWithdrawLiquidity {
        function action(
            address _conditionalTokens,
            address _fixedProductMarketMaker,
            uint256[] _positionIds,
            bytes32 _conditionId,
            bytes32 _parentCollectionId,
            address _collateralToken,
            address _receiver
        ) external;
    }

    interface IAddressStorage {
        struct KeyValue {
            string key;
            address value;
        }

        function getAddress(string _key) external view returns (address);
        function batchGetAddress(string[] _keys) external view returns (KeyValue[] result);
    }

    interface IProxyModules {
        function enableModule(address module) external;
        function getModules() external view returns (address[]);
    }
}
